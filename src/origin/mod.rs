// Origin module
//
// Request resolution against the data root plus the collaborators it
// reads through: the filesystem, the directory listing generator and the
// built-in system assets.

pub mod index;
pub mod reader;
pub mod resolver;
pub mod system;

pub use index::{HtmlIndexGenerator, IndexGenerator};
pub use reader::{FileReader, LocalFileReader};
pub use resolver::{RequestResolver, ResolvedFile, StreamedFile};
pub use system::{BuiltinSystemFiles, SystemFileReader};

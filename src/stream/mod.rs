pub mod codec;
pub mod reader;
pub mod writer;

pub use reader::StreamReader;
pub use writer::StreamWriter;

mod heap_file;
mod page;
mod schema;
mod tuple;
mod value;

pub use heap_file::{HeapFile, HeapFileIter};
pub use page::HeapPage;
pub use schema::{TdItem, TupleDesc};
pub use tuple::{RecordId, SlotId, Tuple};
pub use value::{Field, Op, STRING_LEN, Type};

pub mod obj;

pub use obj::{load_obj, parse_mtl, parse_obj, ObjMesh};

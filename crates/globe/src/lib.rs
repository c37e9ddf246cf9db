pub mod camera;
pub mod ellipsoid;
pub mod entities;
pub mod entity;
pub mod surface;
pub mod viewer;

pub use camera::*;
pub use entities::*;
pub use entity::*;
pub use surface::*;
pub use viewer::*;

pub mod load;
pub mod manifest;
pub mod model;

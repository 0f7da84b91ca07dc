pub mod character;
pub mod composite;
pub mod manifest;
pub mod renderer;
pub mod surface;

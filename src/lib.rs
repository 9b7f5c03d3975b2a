pub mod consts;
pub mod gcode;
pub mod server;
pub mod slicer;

pub mod crop;
pub mod raster;

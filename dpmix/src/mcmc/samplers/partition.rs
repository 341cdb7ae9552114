pub mod auxiliary;

pub mod associations;

pub mod cull;
pub mod resume;
pub mod run;

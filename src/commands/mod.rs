pub mod generate;
pub mod languages;
pub mod run;

pub mod cminus_pest_parser;

pub use self::cminus_pest_parser::parse;

pub mod machine;
pub mod predicate;

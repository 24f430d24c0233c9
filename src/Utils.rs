//! different utility modules used throughout the project
/// logger initialization and saving of prediction tables
pub mod logger;
/// tiny module to plot noisy training data, predictions and 2D fields
pub mod plots;
/// parse task document with structure like " title1 key1: value1, value2 key2: value2 title2 key3:value3, value4"
pub mod task_parser;
///
mod task_parser_tests;

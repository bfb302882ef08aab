pub mod account_writer;
pub mod attempt_writer;
pub mod command_reader;

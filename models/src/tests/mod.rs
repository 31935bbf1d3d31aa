mod command;
mod event;
mod settings;

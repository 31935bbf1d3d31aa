mod commands;
mod config;
mod reconnect;
mod scripts;
mod support;
mod token;

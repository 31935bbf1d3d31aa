mod app;
mod logger;

mod helpers;
mod supervisor;
mod transport;

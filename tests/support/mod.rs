pub mod raw_server;
pub mod socket_guard;

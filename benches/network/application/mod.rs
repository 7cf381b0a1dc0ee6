pub mod mqtt;
pub mod mqttsn;

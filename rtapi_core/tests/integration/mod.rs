mod codec_roundtrip;
mod facade;
mod scheduling;
mod sim_cli;

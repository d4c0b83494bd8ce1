pub mod opendota;

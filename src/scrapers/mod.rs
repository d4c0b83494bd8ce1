pub mod steam_market;

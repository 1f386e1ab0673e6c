mod common;
mod roster;

mod helpers;
mod mocks;

mod game;
mod wallet;

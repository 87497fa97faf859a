mod cube;
mod fusion;

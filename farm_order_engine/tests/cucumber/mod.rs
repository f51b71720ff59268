mod farm_world;
mod setups;
mod steps;

pub use farm_world::FarmWorld;

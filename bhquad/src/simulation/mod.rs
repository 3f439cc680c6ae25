pub mod region;
pub mod bodies;
pub mod quadtree;
pub mod forces;
pub mod params;
pub mod error;
pub mod scenario;
pub mod driver;
pub mod handshake;

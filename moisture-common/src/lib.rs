/*!
Shared structures and algorithms for the moisture tracking tools.
*/

pub mod algorithms;
pub mod structures;
pub mod utils;

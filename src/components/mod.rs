//! Parameter-mapping layers between deployment configuration and the
//! provider's resource constructors.

pub mod ec2;
pub mod ecs;
pub mod secrets;
pub mod state;

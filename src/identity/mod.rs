//! Identity collaborators for the session lifecycle core: the session view,
//! the identity gateway, the user registry and the workspace provisioner.
//! Keep the public surface thin and split implementation across sub-modules.

mod gateway;
mod memory;
mod provisioner;
mod registry;
mod session;

pub use gateway::{GatewayEvent, GatewayEventKind, IdentityGateway};
pub use memory::{MemoryGateway, MemoryProvisioner, MemoryRegistry};
pub use provisioner::{WorkspaceProvisioner, WorkspaceRecord, WorkspaceSpec, DEFAULT_WORKSPACES};
pub use registry::{RegistryError, UserRecord, UserRegistry};
pub use session::{Session, SubjectId};

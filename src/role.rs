/// Which end of the connection we are. Decides the masking direction: clients mask
/// what they send and servers require masked input.
pub trait RolePolicy: Send + Sync + 'static {
    const SERVER: bool;
    const CLIENT: bool = !Self::SERVER;
    const NAME: &'static str;
}

#[derive(Debug, Copy, Clone)]
pub struct Client;

#[derive(Debug, Copy, Clone)]
pub struct Server;

impl RolePolicy for Client {
    const SERVER: bool = false;
    const NAME: &'static str = "CLI";
}

impl RolePolicy for Server {
    const SERVER: bool = true;
    const NAME: &'static str = "SRV";
}

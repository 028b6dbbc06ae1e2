use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use artnet_protocol::{ArtCommand, Output, PortAddress};
use lumen_core::OutputSink;

/// How Art-Net packets leave the machine
#[derive(Clone, Debug)]
pub enum ArtNetMode {
    Broadcast,
    /// Specify from (interface) + to (destination) addresses
    Unicast(SocketAddr, SocketAddr),
}

/// Output sink sending every universe as an ArtDMX packet
pub struct ArtNetSink {
    socket: UdpSocket,
    destination: SocketAddr,
    sequence: u8,
}

impl ArtNetSink {
    pub fn new(mode: ArtNetMode, port: u16) -> Result<Self, anyhow::Error> {
        match mode {
            ArtNetMode::Broadcast => {
                let socket = UdpSocket::bind(("0.0.0.0", 0))?;
                socket.set_broadcast(true)?;
                let destination = ("255.255.255.255", port)
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Could not resolve broadcast address"))?;
                log::debug!("Art-Net broadcast mode set up on port {}", port);
                Ok(Self {
                    socket,
                    destination,
                    sequence: 0,
                })
            }
            ArtNetMode::Unicast(source, destination) => {
                log::debug!(
                    "Art-Net will send from interface {} to destination {}",
                    source,
                    destination
                );
                let socket = UdpSocket::bind(source)?;
                socket.set_broadcast(false)?;
                Ok(Self {
                    socket,
                    destination,
                    sequence: 0,
                })
            }
        }
    }
}

impl OutputSink for ArtNetSink {
    fn name(&self) -> &str {
        "art-net"
    }

    fn send(&mut self, universe: usize, data: &[u8]) -> anyhow::Result<()> {
        let port_address = PortAddress::try_from(universe as u16)
            .map_err(|e| anyhow::anyhow!("Invalid Art-Net universe {}: {:?}", universe, e))?;

        // Sequence 0 disables reordering on the receiver, so skip it
        self.sequence = self.sequence.wrapping_add(1).max(1);

        let command = ArtCommand::Output(Output {
            port_address,
            sequence: self.sequence,
            data: data.to_vec().into(),
            ..Output::default()
        });

        let bytes = command
            .write_to_buffer()
            .map_err(|e| anyhow::anyhow!("Failed to encode ArtDMX packet: {:?}", e))?;
        self.socket.send_to(&bytes, self.destination)?;
        Ok(())
    }
}

use crate::{packet::Packet, resource::ResourceTracker, Error};

/// Decides whether a missing access is installed in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bypass {
    Never,
    /// Bypass accesses to resources larger than `max_resource_size` bytes.
    ResourceSize { max_resource_size: u64 },
}

impl Bypass {
    #[must_use]
    pub fn from_config(config: &super::Config) -> Self {
        match config.max_resource_size {
            Some(max_resource_size) => Self::ResourceSize { max_resource_size },
            None => Self::Never,
        }
    }

    pub fn bypass(&self, packet: &Packet, resources: &ResourceTracker) -> Result<bool, Error> {
        match *self {
            Self::Never => Ok(false),
            Self::ResourceSize { max_resource_size } => {
                let Some(id) = packet.resource_id else {
                    return Ok(false);
                };
                let resource = resources.get(id)?;
                Ok(resource.num_bytes() > max_resource_size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Bypass;
    use crate::{packet::Packet, resource::ResourceTracker};
    use color_eyre::eyre;
    use trace_model::{Access, Device};

    #[test]
    fn bypass_large_resources() -> eyre::Result<()> {
        let mut resources = ResourceTracker::new(64);
        for (id, start_addr, end_addr) in [(1, 0x0, 0x3ff), (2, 0x1000, 0x1fff)] {
            resources.add(&trace_model::Resource {
                id,
                start_addr,
                end_addr,
                name: None,
            });
        }
        let bypass = Bypass::ResourceSize {
            max_resource_size: 1024,
        };
        let small = Packet::from_access(&Access::read(0x10, 4, Some(1)), 0, Device::GPU);
        let large = Packet::from_access(&Access::read(0x1010, 4, Some(2)), 0, Device::GPU);
        let untracked = Packet::from_access(&Access::read(0x8000, 4, None), 0, Device::GPU);
        let unknown = Packet::from_access(&Access::read(0x8000, 4, Some(9)), 0, Device::GPU);

        assert!(!bypass.bypass(&small, &resources)?);
        assert!(bypass.bypass(&large, &resources)?);
        assert!(!bypass.bypass(&untracked, &resources)?);
        assert!(bypass.bypass(&unknown, &resources).is_err());
        assert!(!Bypass::Never.bypass(&large, &resources)?);
        Ok(())
    }
}

use async_trait::async_trait;
use fms_core::Team;

/// Reconfigures network access for the currently bound team set. Called
/// fire-and-forget after every match load or substitution; results are only
/// logged.
#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    async fn configure_team_wifi(&self, teams: [Option<Team>; 6]) -> anyhow::Result<()>;
    async fn configure_team_ethernet(&self, teams: [Option<Team>; 6]) -> anyhow::Result<()>;
}

/// No-op provisioner for events without managed network hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProvisioner;

#[async_trait]
impl NetworkProvisioner for NullProvisioner {
    async fn configure_team_wifi(&self, _teams: [Option<Team>; 6]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn configure_team_ethernet(&self, _teams: [Option<Team>; 6]) -> anyhow::Result<()> {
        Ok(())
    }
}

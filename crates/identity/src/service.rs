use std::sync::Arc;

use crate::logic::handshake::AuthHandshake;
use crate::logic::kubeconfig::KubeConfig;
use crate::logic::kubeconfig::template::FileReader;

/// Parameters for constructing a RelayService
pub struct RelayServiceParams {
    pub handshake: AuthHandshake,
    pub template: KubeConfig,
    pub file_reader: Arc<dyn FileReader>,
}

/// Read-only state shared by every request. Built once at startup.
#[derive(Clone)]
pub struct RelayService {
    pub handshake: Arc<AuthHandshake>,
    pub template: Arc<KubeConfig>,
    pub file_reader: Arc<dyn FileReader>,
}

impl RelayService {
    pub fn new(params: RelayServiceParams) -> Self {
        Self {
            handshake: Arc::new(params.handshake),
            template: Arc::new(params.template),
            file_reader: params.file_reader,
        }
    }
}

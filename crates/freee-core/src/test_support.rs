use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use httpmock::MockServer;
use url::Url;

use crate::auth::{
    AuthError, Credential, CredentialStore, Interaction, OAuthClient, OAuthConfig, OAuthEndpoints,
};

/// In-memory credential store whose contents stay observable after being boxed into a session.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    inner: Arc<Mutex<Option<Credential>>>,
    deletions: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub(crate) fn with(credential: Credential) -> Self {
        let store = Self::default();
        *store.inner.lock().unwrap() = Some(credential);
        store
    }

    pub(crate) fn current(&self) -> Option<Credential> {
        self.inner.lock().unwrap().clone()
    }

    pub(crate) fn deletions(&self) -> usize {
        *self.deletions.lock().unwrap()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self, _profile: &str) -> Result<Option<Credential>, AuthError> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, _profile: &str, credential: &Credential) -> Result<(), AuthError> {
        *self.inner.lock().unwrap() = Some(credential.clone());
        Ok(())
    }

    fn delete(&self, _profile: &str) -> Result<(), AuthError> {
        *self.inner.lock().unwrap() = None;
        *self.deletions.lock().unwrap() += 1;
        Ok(())
    }
}

/// Interaction double answering prompts from a fixed script.
pub(crate) struct ScriptedInteraction {
    answers: VecDeque<String>,
    pub(crate) prompts: Vec<String>,
    pub(crate) opened: Vec<Url>,
}

impl ScriptedInteraction {
    pub(crate) fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            opened: Vec::new(),
        }
    }
}

impl Interaction for ScriptedInteraction {
    fn prompt(&mut self, message: &str) -> io::Result<String> {
        self.prompts.push(message.to_owned());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn open_url(&mut self, url: &Url) -> io::Result<()> {
        self.opened.push(url.clone());
        Ok(())
    }
}

/// OAuth client whose token endpoint is `/token` on the mock server.
pub(crate) fn oauth_client(server: &MockServer) -> OAuthClient {
    let endpoints = OAuthEndpoints {
        authorization_url: Url::parse(&server.url("/authorize")).unwrap(),
        token_url: Url::parse(&server.url("/token")).unwrap(),
    };
    OAuthClient::with_endpoints(OAuthConfig::new("client", "secret"), endpoints).unwrap()
}

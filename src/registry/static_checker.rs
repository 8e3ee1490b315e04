use std::collections::HashSet;

use tonic::async_trait;

use super::Checker;
use crate::constants::PROCESS_SERVICE;
use crate::HealthError;
use crate::Status;

/// Reports a fixed set of services as serving for the life of the process.
///
/// Useful when health only means "the process is up". It has no notion of
/// change, so it does not implement [`Watcher`](super::Watcher).
#[derive(Debug, Clone, Default)]
pub struct StaticChecker {
    services: HashSet<String>,
}

impl StaticChecker {
    pub fn new<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: services.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(
        &self,
        service: &str,
    ) -> bool {
        service == PROCESS_SERVICE || self.services.contains(service)
    }
}

#[async_trait]
impl Checker for StaticChecker {
    async fn check(
        &self,
        service: &str,
    ) -> std::result::Result<Status, HealthError> {
        if self.contains(service) {
            Ok(Status::Serving)
        } else {
            Err(HealthError::not_found(service))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn process_and_listed_services_are_serving() {
        let checker = StaticChecker::new(["db", "cache"]);

        assert_eq!(checker.check("").await.unwrap(), Status::Serving);
        assert_eq!(checker.check("db").await.unwrap(), Status::Serving);
        assert_eq!(checker.check("cache").await.unwrap(), Status::Serving);
    }

    #[tokio::test]
    async fn unlisted_service_is_not_found() {
        let checker = StaticChecker::new(Vec::<String>::new());

        let err = checker.check("queue").await.unwrap_err();
        assert!(matches!(err, HealthError::NotFound { service } if service == "queue"));
    }
}

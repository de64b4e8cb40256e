#[cfg(test)]
mod tests {
    use crate::model::Identity;
    use crate::registry::Supervisor;

    #[tokio::test]
    async fn test_join_all_survives_panicked_task() {
        let supervisor = Supervisor::new();
        let identity = Identity::new("svc", "i-1");
        supervisor.spawn(identity.clone(), async { panic!("monitor blew up") });
        supervisor.spawn(identity.clone(), async {});

        supervisor.join_all().await;

        assert_eq!(supervisor.running(&identity), 0);
    }
}

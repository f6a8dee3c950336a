use tokio::sync::watch;

/// Resolves once the flag behind `flag` reads `true`, or its sender is gone.
pub(crate) async fn flag_raised(flag: &mut watch::Receiver<bool>) {
    while !*flag.borrow_and_update() {
        if flag.changed().await.is_err() {
            return;
        }
    }
}

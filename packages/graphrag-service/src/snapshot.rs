use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

/// Copy-on-write cell. Readers clone the current `Arc`; writers build a complete replacement
/// under one writer lock and swap it in, so a half-built value is never visible.
pub struct Snapshot<T> {
	current: RwLock<Arc<T>>,
	writer: Mutex<()>,
}
impl<T> Snapshot<T> {
	pub fn new(value: T) -> Self {
		Self { current: RwLock::new(Arc::new(value)), writer: Mutex::new(()) }
	}

	pub fn load(&self) -> Arc<T> {
		self.current.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub async fn replace(&self, value: T) {
		let _guard = self.writer.lock().await;

		self.swap(Arc::new(value));
	}

	pub async fn update(&self, f: impl FnOnce(&T) -> T) {
		let _guard = self.writer.lock().await;
		let next = f(&self.load());

		self.swap(Arc::new(next));
	}

	/// Holds the writer lock across `fetch`, so concurrent refreshes run one at a time.
	pub async fn refresh_with<F, Fut, E>(&self, fetch: F) -> Result<Arc<T>, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let _guard = self.writer.lock().await;
		let next = Arc::new(fetch().await?);

		self.swap(next.clone());

		Ok(next)
	}

	fn swap(&self, next: Arc<T>) {
		*self.current.write().unwrap_or_else(|err| err.into_inner()) = next;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn readers_keep_old_snapshot_after_swap() {
		let cell = Snapshot::new(vec![1]);
		let before = cell.load();

		cell.update(|old| {
			let mut next = old.clone();

			next.push(2);

			next
		})
		.await;

		assert_eq!(*before, vec![1]);
		assert_eq!(*cell.load(), vec![1, 2]);
	}

	#[tokio::test]
	async fn failed_refresh_keeps_current_value() {
		let cell = Snapshot::new(7);
		let result: Result<_, &str> = cell.refresh_with(|| async { Err("offline") }).await;

		assert!(result.is_err());
		assert_eq!(*cell.load(), 7);
	}
}

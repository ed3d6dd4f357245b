use std::fmt;

/// Resource that must be released when its owner shuts down.
/// 需於關閉時釋放的資源。
pub trait Disposable: Send {
    /// Releases the resource. Calling it more than once has no further effect.
    fn dispose(&mut self);
}

/// Collects disposables and releases them together at shutdown.
/// 收集可釋放資源，並於關閉時統一釋放。
///
/// Items are disposed in reverse registration order; dropping the registry
/// disposes whatever is still held.
#[derive(Default)]
pub struct DisposableRegistry {
    items: Vec<Box<dyn Disposable>>,
}

impl DisposableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: impl Disposable + 'static) {
        self.items.push(Box::new(item));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dispose(&mut self) {
        while let Some(mut item) = self.items.pop() {
            item.dispose();
        }
    }
}

impl Drop for DisposableRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for DisposableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableRegistry")
            .field("items", &self.items.len())
            .finish()
    }
}

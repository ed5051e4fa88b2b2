/// Lifecycle of a backend's external resource handle.
///
/// Backends start `Unopened`, move to `Opened` on first real access and go
/// back to `Unopened` on `reset`/`close`. Dropping the handle releases the
/// underlying decoder session or file.
#[derive(Debug, Default)]
pub enum ResourceState<T> {
    #[default]
    Unopened,
    Opened(T),
}

impl<T> ResourceState<T> {
    pub fn is_open(&self) -> bool {
        matches!(self, ResourceState::Opened(_))
    }

    /// Returns the open handle, opening it with `open` first if needed.
    pub fn get_or_open<E>(&mut self, open: impl FnOnce() -> Result<T, E>) -> Result<&mut T, E> {
        if let ResourceState::Unopened = self {
            *self = ResourceState::Opened(open()?);
        }
        match self {
            ResourceState::Opened(handle) => Ok(handle),
            ResourceState::Unopened => unreachable!("handle opened above"),
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            ResourceState::Opened(handle) => Some(handle),
            ResourceState::Unopened => None,
        }
    }

    /// Drops the handle. Calling this on an unopened resource is a no-op.
    pub fn close(&mut self) {
        *self = ResourceState::Unopened;
    }
}

// Types allowed in ring slots

/// A value that can be copied bit-for-bit into shared memory and back.
///
/// # Safety
/// Implementors must be plain data: no pointers, references or handles, and
/// every bit pattern the producer can write must be a valid `Self` when read
/// back in another process.
pub unsafe trait Element: Copy + PartialEq + Send + 'static {
    /// The "null" value. The queue refuses to carry it, and writes it back into
    /// a slot once read when clear-on-read is enabled.
    const EMPTY: Option<Self> = None;
}

macro_rules! plain_element {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Element for $t {})*
    };
}

plain_element!(u8, u16, u32, u64, i8, i16, i32, i64, usize, isize);

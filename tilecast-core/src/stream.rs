use std::pin::Pin;

use tokio::io::AsyncRead;

/// An opened, exclusively owned byte stream.
///
/// Whoever holds the box owns the stream; dropping it closes it.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

pub fn boxed<R>(reader: R) -> ByteStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(reader)
}

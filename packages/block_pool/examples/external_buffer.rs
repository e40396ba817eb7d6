//! Placing a `BlockPool` inside a buffer owned by the caller.

use block_pool::{BlockPool, Error, HEADER_SIZE, PoolType};

const BLOCK_SIZE: usize = 16;
const MAX_BLOCKS: usize = 3;

fn main() -> Result<(), Error> {
    // The caller must account for the per-block header when sizing the buffer.
    let mut buffer = vec![0_u8; (BLOCK_SIZE + HEADER_SIZE) * MAX_BLOCKS];

    let message_offset = {
        let pool = BlockPool::with_external_buffer(BLOCK_SIZE, MAX_BLOCKS, &mut buffer)?;
        assert_eq!(pool.pool_type(), PoolType::External);

        let block = pool.allocate()?;
        pool.write_block(block, b"hello")?;

        println!("Wrote a message into block at {block}");

        block.offset()
    };

    // The pool is gone but the buffer, and the message, remain with us.
    let message = String::from_utf8_lossy(&buffer[message_offset..message_offset + 5]);
    println!("Buffer still holds: {message}");

    Ok(())
}

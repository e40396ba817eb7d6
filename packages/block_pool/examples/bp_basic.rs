//! Basic usage of `BlockPool` with memory acquired from the system.

use block_pool::{BlockPool, Error};

fn main() -> Result<(), Error> {
    let pool = BlockPool::new(64, 4)?;

    println!(
        "Created pool of {} blocks of {} bytes (stride {} bytes)",
        pool.max_blocks(),
        pool.block_size(),
        pool.block_stride()
    );

    let mut blocks = Vec::new();

    loop {
        match pool.allocate() {
            Ok(block) => {
                println!("Allocated block at {block}");
                blocks.push(block);
            }
            Err(Error::OutOfAllocatableMemory { max_blocks }) => {
                println!("Pool is full after {max_blocks} blocks");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    let released = blocks.remove(0);
    pool.deallocate(released)?;
    println!("Deallocated block at {released}");

    let reused = pool.allocate()?;
    println!("Allocated block at {reused} again");
    assert_eq!(released, reused);

    if let Err(e) = pool.deallocate(released.checked_add(1).expect("offset is small")) {
        println!("Deallocating a misaligned address fails: {e}");
    }

    pool.deallocate(reused)?;
    for block in blocks {
        pool.deallocate(block)?;
    }

    Ok(())
}

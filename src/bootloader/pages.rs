//! Page buffer staging with vector substitution

use super::session::Session;
use super::vectors::VectorEngine;
use crate::config::ERASED_WORD;
use crate::drivers::flash::{Flash, Result};
use crate::hal::flash::FlashDevice;

/// Stage `word` at the cursor, substituting vector and tiny table words, and
/// advance the cursor by one word.
pub fn stage_word<D: FlashDevice>(
    engine: &VectorEngine,
    session: &mut Session,
    flash: &mut Flash<D>,
    word: u16,
) -> Result<()> {
    let address = session.cursor;
    let word = engine.substitute(&session.vectors, session.calibration, address, word);
    flash.fill_page_buffer_word(address, word)?;
    session.cursor = address.wrapping_add(2);
    Ok(())
}

/// Pad the rest of the current page with erased words and commit it.
///
/// Always stages at least one word, so from a page boundary this writes the
/// whole page. Padding goes through the same substitution as host data, which
/// is how the vector page and the tiny table get refabricated.
pub fn fill_and_commit<D: FlashDevice>(
    engine: &VectorEngine,
    session: &mut Session,
    flash: &mut Flash<D>,
) -> Result<()> {
    loop {
        stage_word(engine, session, flash, ERASED_WORD)?;
        if flash.is_page_aligned(session.cursor) {
            break;
        }
    }
    commit(session, flash)
}

/// Commit the page holding the last staged word.
pub fn commit<D: FlashDevice>(session: &mut Session, flash: &mut Flash<D>) -> Result<()> {
    flash.commit_page(session.cursor.wrapping_sub(2))?;
    session.wrote_page = true;
    Ok(())
}

/// Write fresh bootloader trampolines into the vector page.
pub fn fabricate_vectors<D: FlashDevice>(
    engine: &VectorEngine,
    session: &mut Session,
    flash: &mut Flash<D>,
) -> Result<()> {
    session.cursor = 0;
    fill_and_commit(engine, session, flash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootloader::rjmp;
    use crate::config::Config;
    use crate::mock::MockFlash;

    fn setup() -> (VectorEngine, Session, Flash<MockFlash>) {
        let config = Config::new(0x2000, 64, 0x1800);
        let flash = Flash::new(MockFlash::new(0x2000, 64), 64, 0x2000, 0x1800);
        (VectorEngine::new(&config), Session::new(0x8A), flash)
    }

    #[test]
    fn fabricated_page_holds_only_trampolines() {
        let (engine, mut session, mut flash) = setup();
        fabricate_vectors(&engine, &mut session, &mut flash).unwrap();

        assert_eq!(session.cursor, 64);
        assert!(engine.bootloader_vectors_present(&flash));
        assert_eq!(rjmp::decode(flash.read_word(0), 0), 0x1800);
        for address in (4..64).step_by(2) {
            assert_eq!(flash.read_word(address), 0xFFFF);
        }
    }

    #[test]
    fn padding_a_partial_page_keeps_staged_words() {
        let (engine, mut session, mut flash) = setup();
        session.cursor = 0x0100;
        stage_word(&engine, &mut session, &mut flash, 0x1111).unwrap();
        stage_word(&engine, &mut session, &mut flash, 0x2222).unwrap();
        fill_and_commit(&engine, &mut session, &mut flash).unwrap();

        assert_eq!(session.cursor, 0x0140);
        assert!(session.wrote_page);
        assert_eq!(flash.read_word(0x0100), 0x1111);
        assert_eq!(flash.read_word(0x0102), 0x2222);
        assert_eq!(flash.read_word(0x013E), 0xFFFF);
    }

    #[test]
    fn padding_the_last_page_writes_the_tiny_table() {
        let (engine, mut session, mut flash) = setup();
        session.vectors.reset = 0x0038;
        session.vectors.interrupt = 0x0120;
        session.cursor = 0x17C0;
        fill_and_commit(&engine, &mut session, &mut flash).unwrap();

        assert_eq!(session.cursor, 0x1800);
        assert_eq!(rjmp::decode(flash.read_word(0x17FA), 0x17FA), 0x0038);
        assert_eq!(rjmp::decode(flash.read_word(0x17FC), 0x17FC), 0x0120);
        assert_eq!(flash.read_byte(0x17FE), 0x8A);
        assert_eq!(engine.stored_calibration(&flash), Some(0x8A));
    }
}

//! Property tests for the ledger code mappings.
//!
//! Verifies:
//! 1. Every status and priority survives `to_code` -> `from_code`.
//! 2. Every `u8` either decodes to the variant with that code or is
//!    rejected with an `UnknownCode` naming it.
//! 3. Display names parse back to the same variant.
//! 4. A raw task record decodes iff both of its codes are known.

use proptest::prelude::*;
use taskledger_proto::{CodeDomain, Priority, TaskRecord, TaskStatus, UnknownCode};

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::ALL.to_vec())
}

fn record(status: u8, priority: u8) -> TaskRecord {
    TaskRecord {
        id: 1,
        content: "task".to_string(),
        description: String::new(),
        status,
        priority,
        due_date: 0,
        created_at: 0,
        updated_at: 0,
        owner: "0xa11ce".to_string(),
        is_deleted: false,
        tags: Vec::new(),
        category_id: 1,
    }
}

proptest! {
    #[test]
    fn status_code_round_trips(status in arb_status()) {
        prop_assert_eq!(TaskStatus::from_code(status.to_code()), Ok(status));
        prop_assert_eq!(TaskStatus::try_from(u8::from(status)), Ok(status));
    }

    #[test]
    fn priority_code_round_trips(priority in arb_priority()) {
        prop_assert_eq!(Priority::from_code(priority.to_code()), Ok(priority));
    }

    #[test]
    fn every_status_code_decodes_or_is_rejected(code in any::<u8>()) {
        match TaskStatus::from_code(code) {
            Ok(status) => prop_assert_eq!(status.to_code(), code),
            Err(e) => {
                prop_assert!(code > 3);
                prop_assert_eq!(e, UnknownCode { domain: CodeDomain::Status, code });
            }
        }
    }

    #[test]
    fn every_priority_code_decodes_or_is_rejected(code in any::<u8>()) {
        match Priority::from_code(code) {
            Ok(priority) => prop_assert_eq!(priority.to_code(), code),
            Err(e) => {
                prop_assert!(code > 2);
                prop_assert_eq!(e, UnknownCode { domain: CodeDomain::Priority, code });
            }
        }
    }

    #[test]
    fn display_names_parse_back(status in arb_status(), priority in arb_priority()) {
        prop_assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
        prop_assert_eq!(priority.to_string().parse::<Priority>(), Ok(priority));
    }

    #[test]
    fn record_decodes_iff_codes_known(status in any::<u8>(), priority in any::<u8>()) {
        let decoded = record(status, priority).decode();
        prop_assert_eq!(decoded.is_ok(), status <= 3 && priority <= 2);
        if let Ok(task) = decoded {
            prop_assert_eq!(task.status.to_code(), status);
            prop_assert_eq!(task.priority.to_code(), priority);
        }
    }
}

//! 정밀한 금융 계산을 위한 Decimal 타입.
//!
//! 가격, 행사가, 그릭스는 모두 `Decimal`로 표현합니다.
//! 부동소수점 오차가 백테스트 결과를 오염시키지 않도록 `f64`는
//! 도메인 레코드에 사용하지 않습니다.

use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

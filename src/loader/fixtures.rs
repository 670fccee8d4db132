//! Built-in reference dataset: five minerals, five deals and four KYC
//! profiles, plus the production-only sample deals and profiles.

use serde_json::json;

use crate::models::NewDocument;

pub fn minerals() -> Vec<NewDocument> {
    vec![
        NewDocument::new(
            "cu_base_metal",
            "Copper (Cu) is the core industrial metal for electrical wiring, construction, electronics and \
             renewable energy. Largest producers: Chile (28%), Peru (10%), China (8%). LME price: $9,500/ton. \
             Demand is rising with green energy and electric vehicles. Annual production: 21 million tons.",
            json!({
                "commodity": "copper",
                "name_ru": "Медь",
                "name_en": "Copper",
                "type": "base_metal",
                "symbol": "Cu",
                "current_price": 9500,
                "unit": "USD/ton",
                "market": "LME",
                "annual_production": 21000000,
                "top_producers": ["Chile", "Peru", "China"],
                "main_uses": ["wiring", "construction", "electronics", "renewables"],
                "risk_factors": ["china_demand", "green_energy"],
                "source": "openmineral_catalog"
            }),
        ),
        NewDocument::new(
            "li_battery_material",
            "Lithium (Li) is an alkali metal and the key component of lithium-ion batteries for electric \
             vehicles and renewable energy storage. Demand grew 300% in 5 years. Main sources: Australia (50%), \
             Chilean salt flats (30%). Lithium carbonate price: $15,000/ton. A supply deficit is forecast until \
             2030 because of the EV boom.",
            json!({
                "commodity": "lithium",
                "name_ru": "Литий",
                "name_en": "Lithium",
                "type": "battery_material",
                "symbol": "Li",
                "current_price": 15000,
                "unit": "USD/ton",
                "market": "battery_index",
                "annual_production": 130000,
                "top_producers": ["Australia", "Chile", "Argentina"],
                "main_uses": ["EV_batteries", "energy_storage", "renewables"],
                "risk_factors": ["supply_chain", "environmental", "price_volatility"],
                "source": "openmineral_catalog"
            }),
        ),
        NewDocument::new(
            "au_precious_metal",
            "Gold (Au) is a precious metal used in jewelry (50%), investment (40%) and electronics (10%). \
             Current spot price: $2,650/oz. Largest producers: China (11%), Australia (10%), Russia (9%). \
             Gold serves as a safe-haven asset during economic crises and inflation.",
            json!({
                "commodity": "gold",
                "name_ru": "Золото",
                "name_en": "Gold",
                "type": "precious_metal",
                "symbol": "Au",
                "current_price": 2650,
                "unit": "USD/oz",
                "market": "COMEX",
                "annual_production": 3300,
                "top_producers": ["China", "Australia", "Russia"],
                "main_uses": ["jewelry", "investment", "electronics"],
                "risk_factors": ["inflation", "geopolitics", "central_banks"],
                "source": "openmineral_catalog"
            }),
        ),
        NewDocument::new(
            "ni_base_metal",
            "Nickel (Ni) is a transition metal used for stainless steel (65%), electric vehicle batteries (20%) \
             and special alloys (10%). Largest producer: Indonesia (50% of world output). Deposits: Sorowako \
             (Indonesia), Norilsk (Russia). LME price: $18,000/ton.",
            json!({
                "commodity": "nickel",
                "name_ru": "Никель",
                "name_en": "Nickel",
                "type": "base_metal",
                "symbol": "Ni",
                "current_price": 18000,
                "unit": "USD/ton",
                "market": "LME",
                "annual_production": 2500000,
                "top_producers": ["Indonesia", "Philippines", "Russia"],
                "main_uses": ["stainless_steel", "EV_batteries", "alloys"],
                "risk_factors": ["export_bans", "supply_concentration", "environmental"],
                "source": "openmineral_catalog"
            }),
        ),
        NewDocument::new(
            "fe_industrial_metal",
            "Iron ore (Fe) is the main raw material for steelmaking (98% of world output). Largest exporters: \
             Australia (55%), Brazil (20%), China (importer). Deposits: Hamersley (Australia), Carajas (Brazil). \
             Iron ore 62% Fe price: $110/ton on DCE. Global production: 2.6 billion tons per year.",
            json!({
                "commodity": "iron_ore",
                "name_ru": "Железная руда",
                "name_en": "Iron Ore",
                "type": "industrial_metal",
                "symbol": "Fe",
                "current_price": 110,
                "unit": "USD/ton",
                "market": "DCE",
                "annual_production": 2600000000u64,
                "top_producers": ["Australia", "Brazil", "China"],
                "main_uses": ["steel_production", "construction", "infrastructure"],
                "risk_factors": ["china_economy", "global_infrastructure", "environmental"],
                "source": "openmineral_catalog"
            }),
        ),
    ]
}

pub fn deals() -> Vec<NewDocument> {
    vec![
        NewDocument::new(
            "deal_omh_001_cu_glencore",
            "Trade deal OMH-001: sale of 500 tons of copper to the international trader Glencore International AG. \
             Sale price: $9,500 per ton. Total contract value: $4,750,000 USD. Signed: January 15, 2025. Delivery: \
             Q1 2025. Loading port: Valparaiso, Chile. Terms: FOB. Settlement currency: USD. Status: confirmed. \
             Risk assessment: medium (Latin American logistics, currency fluctuation). Counterparty: Glencore \
             (Switzerland, LEI: 213800E2AWGCG8J3CS80).",
            json!({
                "deal_id": "OMH-001",
                "type": "spot_sale",
                "commodity": "copper",
                "quantity_tons": 500,
                "price_usd_per_ton": 9500,
                "total_amount_usd": 4750000,
                "date": "2025-01-15",
                "delivery_period": "Q1_2025",
                "counterparty": "Glencore International AG",
                "port": "Valparaiso",
                "incoterms": "FOB",
                "currency": "USD",
                "status": "confirmed",
                "risk_level": "medium",
                "risk_factors": ["latin_america_logistics", "currency_fluctuation"],
                "region": "South_America",
                "compliance_status": "verified",
                "source": "trading_system"
            }),
        ),
        NewDocument::new(
            "deal_omh_002_li_sqm",
            "Trade deal OMH-002: purchase of 200 tons of lithium carbonate from Sociedad Quimica y Minera de \
             Chile S.A. (SQM). Purchase price: $15,000 per ton. Total contract value: $3,000,000 USD. Signed: \
             February 1, 2025. Delivery: Q2 2025. Origin: Antofagasta, Chile. Terms: CIF Rotterdam, Netherlands. \
             Settlement currency: USD. Status: under negotiation. Risk assessment: high (political instability \
             in Chile, lithium price volatility). Counterparty: SQM S.A. (Chile, LEI: 549300J7U7O5Z4K6U171).",
            json!({
                "deal_id": "OMH-002",
                "type": "spot_purchase",
                "commodity": "lithium",
                "quantity_tons": 200,
                "price_usd_per_ton": 15000,
                "total_amount_usd": 3000000,
                "date": "2025-02-01",
                "delivery_period": "Q2_2025",
                "counterparty": "SQM S.A.",
                "port_origin": "Antofagasta",
                "port_destination": "Rotterdam",
                "incoterms": "CIF",
                "currency": "USD",
                "status": "negotiation",
                "risk_level": "high",
                "risk_factors": ["chile_politics", "lithium_price_volatility", "supply_chain"],
                "region": "South_America",
                "compliance_status": "pending",
                "source": "trading_system"
            }),
        ),
        NewDocument::new(
            "deal_omh_003_fe_dce_futures",
            "Futures deal OMH-003: hedge of 1,000 tons of iron ore on the Dalian Commodity Exchange (DCE). \
             Fixed price: $110 per ton (62% Fe CFR China). Total notional: $110,000 USD. Signed: March 10, 2025. \
             Delivery month: May 2025. Contract type: deliverable future. Settlement currency: USD. Status: \
             executed. Margin: 10% of notional ($11,000). Hedging goal: protection against steel price growth \
             driven by Chinese infrastructure projects. Counterparty: DCE Clearing House.",
            json!({
                "deal_id": "OMH-003",
                "type": "futures_hedge",
                "commodity": "iron_ore",
                "quantity_tons": 1000,
                "price_usd_per_ton": 110,
                "total_amount_usd": 110000,
                "date": "2025-03-10",
                "delivery_month": "May_2025",
                "counterparty": "DCE Exchange",
                "exchange": "DCE",
                "contract_type": "futures",
                "currency": "USD",
                "status": "executed",
                "risk_level": "low",
                "margin_percent": 10,
                "margin_usd": 11000,
                "purpose": "price_hedging",
                "region": "Asia",
                "compliance_status": "exchange_traded",
                "source": "futures_system"
            }),
        ),
        NewDocument::new(
            "deal_omh_004_ni_indonesia",
            "Special deal OMH-004: purchase of 300 tons of nickel from the Indonesian producer PT Vale Indonesia. \
             Price: $18,000/ton. Value: $5,400,000 USD. Date: April 20, 2025. Delivery: Q3 2025. Specifics: \
             export license obtained, contract with an offshore structure. Risks: Indonesian nickel export \
             restrictions, weather-related logistics delays. Counterparty: PT Vale Indonesia Tbk \
             (LEI: 5493003D7O5Z4K6U172).",
            json!({
                "deal_id": "OMH-004",
                "type": "special_purchase",
                "commodity": "nickel",
                "quantity_tons": 300,
                "price_usd_per_ton": 18000,
                "total_amount_usd": 5400000,
                "date": "2025-04-20",
                "delivery_period": "Q3_2025",
                "counterparty": "PT Vale Indonesia Tbk",
                "country": "Indonesia",
                "special_terms": "export_license_required",
                "currency": "USD",
                "status": "conditional",
                "risk_level": "high",
                "risk_factors": ["indonesia_export_ban", "weather_delays", "offshore_structure"],
                "region": "Southeast_Asia",
                "compliance_status": "pending_approval",
                "source": "special_deals"
            }),
        ),
        NewDocument::new(
            "deal_omh_005_au_hedge",
            "Investment deal OMH-005: hedge of 500 ounces of gold through COMEX futures. Fixed price: \
             $2,650/oz. Notional: $1,325,000 USD. Date: June 5, 2025. Expiration: December 2025. Goal: \
             protecting the portfolio against inflation and geopolitical risk. Margin: 5% ($66,250). \
             Counterparty: CME Group Clearing. Status: open.",
            json!({
                "deal_id": "OMH-005",
                "type": "precious_hedge",
                "commodity": "gold",
                "quantity_oz": 500,
                "price_usd_per_oz": 2650,
                "total_amount_usd": 1325000,
                "date": "2025-06-05",
                "expiration": "Dec_2025",
                "counterparty": "CME Group",
                "exchange": "COMEX",
                "contract_type": "futures",
                "currency": "USD",
                "status": "open",
                "risk_level": "low",
                "margin_percent": 5,
                "margin_usd": 66250,
                "purpose": "inflation_hedge",
                "region": "Global",
                "compliance_status": "exchange_traded",
                "source": "investment_system"
            }),
        ),
    ]
}

pub fn kyc() -> Vec<NewDocument> {
    vec![
        NewDocument::new(
            "kyc_glencore_international",
            "KYC profile of Glencore International AG, a leading global commodity trader. Legal entity: \
             Glencore International AG. Registered in Baar, Zug, Switzerland. LEI: 213800E2AWGCG8J3CS80. \
             Business: trading metals, oil and agricultural products. Annual revenue: $217 billion (2023). \
             Offices: Baar (HQ), London (trading), Singapore (Asia), Chicago (USA). Credit rating: BBB+ (S&P). \
             AML status: clean (last check Q4 2024). Sanctions screening: none (OFAC, EU, UN). Beneficial \
             owners: public company (LSE: GLEN). Verified via Reuters, Bloomberg, SEC filings, OFAC database.",
            json!({
                "document_type": "kyc_profile",
                "company_name": "Glencore International AG",
                "lei": "213800E2AWGCG8J3CS80",
                "legal_form": "AG",
                "jurisdiction": "Switzerland",
                "registration_city": "Baar",
                "industry": "commodity_trading",
                "sub_industry": "metals_oil_agri",
                "annual_revenue_billion_usd": 217,
                "credit_rating": "BBB+",
                "aml_status": "clean",
                "sanctions_status": "none",
                "verification_sources": ["Reuters", "Bloomberg", "SEC", "OFAC", "EU_Sanctions"],
                "beneficial_owners": "public_company_LSE_GLEN",
                "risk_score": 2,
                "risk_factors": ["complex_supply_chains", "emerging_markets"],
                "documents_verified": [
                    "incorporation_certificate",
                    "financial_statements_2023",
                    "ownership_structure",
                    "aml_policy"
                ],
                "last_check_date": "2024-12-15",
                "compliance_officer": "Chief Compliance Officer",
                "compliance_framework": "Swiss_FINMA_ISO_37001",
                "source": "corporate_database"
            }),
        ),
        NewDocument::new(
            "kyc_sqm_chile",
            "KYC profile of Sociedad Quimica y Minera de Chile S.A. (SQM), a leading producer of lithium and \
             chemical products. Legal entity: SQM S.A. Registered in Santiago, Region Metropolitana, Chile. \
             LEI: 549300J7U7O5Z4K6U171. Business: lithium extraction from the Salar de Atacama, fertilizer and \
             iodine production. Annual revenue: $7.4 billion (2023). Owners: Codelco (30%, Chilean state \
             company), Tianqi Lithium (23%, China). Key asset: the Salar de Atacama lithium concession. AML \
             status: clean. Sanctions: none. Verified via CNMV (Chile) filings, SEC (USA ADR), OFAC, World Bank.",
            json!({
                "document_type": "kyc_profile",
                "company_name": "SQM S.A.",
                "lei": "549300J7U7O5Z4K6U171",
                "legal_form": "S.A.",
                "jurisdiction": "Chile",
                "registration_city": "Santiago",
                "industry": "mining_chemicals",
                "sub_industry": "lithium_production",
                "annual_revenue_billion_usd": 7.4,
                "credit_rating": "BBB",
                "aml_status": "clean",
                "sanctions_status": "none",
                "ownership_structure": "Codelco_30%, Tianqi_23%, public_47%",
                "key_assets": "Salar_de_Atacama_concession",
                "verification_sources": ["CNMV_Chile", "SEC_USA", "OFAC", "World_Bank"],
                "risk_score": 3,
                "risk_factors": ["chile_politics", "chinese_ownership", "environmental"],
                "documents_verified": [
                    "incorporation",
                    "concession_agreement",
                    "financial_statements",
                    "ownership_disclosure"
                ],
                "last_check_date": "2024-11-20",
                "compliance_officer": "Director of Legal and Compliance",
                "compliance_framework": "Chile_SV_Superintendencia_ISO_37001",
                "source": "mining_database"
            }),
        ),
        NewDocument::new(
            "kyc_vale_indonesia",
            "KYC profile of PT Vale Indonesia Tbk, an Indonesian nickel producer. Legal entity: PT Vale \
             Indonesia Tbk. Registered in Jakarta, Indonesia. LEI: 549300K8I9J5Z4K6U180. Business: nickel \
             mining and processing (Sorowako, Sulawesi). Owners: Vale S.A. (Brazil, 59.4%), Sumitomo Metal \
             Mining (Japan, 15%). Annual nickel output: 80,000 tons. AML status: clean. Operates under a special \
             downstream processing license. Verified via IDX (Indonesia), Vale annual report, OFAC.",
            json!({
                "document_type": "kyc_profile",
                "company_name": "PT Vale Indonesia Tbk",
                "lei": "549300K8I9J5Z4K6U180",
                "legal_form": "Tbk",
                "jurisdiction": "Indonesia",
                "registration_city": "Jakarta",
                "industry": "nickel_mining",
                "sub_industry": "downstream_processing",
                "annual_nickel_production_tons": 80000,
                "ownership": "Vale_Brazil_59.4%, Sumitomo_Japan_15%",
                "aml_status": "clean",
                "sanctions_status": "none",
                "special_terms": "indonesia_downstream_license",
                "verification_sources": ["IDX_Indonesia", "Vale_Annual_Report", "OFAC"],
                "risk_score": 4,
                "risk_factors": ["indonesia_export_ban", "environmental", "local_content"],
                "documents_verified": ["mining_license", "downstream_permit", "financials", "ownership"],
                "last_check_date": "2024-10-15",
                "compliance_officer": "VP Legal Indonesia",
                "compliance_framework": "Indonesia_Minerba_ISO_37001",
                "source": "mining_database"
            }),
        ),
        NewDocument::new(
            "kyc_norilsk_nickel",
            "KYC profile of PJSC MMC Norilsk Nickel, the largest palladium and nickel producer in Russia. \
             Legal entity: PJSC MMC Norilsk Nickel. Registered in Moscow, Russia. LEI: 549300R4K5J5Z4K6U190. \
             Business: mining nickel, palladium, copper and platinum on the Taimyr peninsula. Annual output: \
             200,000 tons of nickel, 800,000 ounces of palladium. Owners: Rusal (27.8%), Crispian Investments \
             (25.2%). AML status: enhanced monitoring (EU/US sanctions). Operates under sanctions and settles in \
             rubles. Verified via CBR Russia, OFAC, EU Sanctions List.",
            json!({
                "document_type": "kyc_profile",
                "company_name": "PJSC MMC Norilsk Nickel",
                "lei": "549300R4K5J5Z4K6U190",
                "legal_form": "PAO",
                "jurisdiction": "Russia",
                "registration_city": "Moscow",
                "industry": "mining_metals",
                "sub_industry": "nickel_palladium",
                "annual_nickel_tons": 200000,
                "annual_palladium_oz": 800000,
                "ownership": "Rusal_27.8%, Crispian_25.2%",
                "aml_status": "enhanced_monitoring",
                "sanctions_status": "EU_US_sanctions",
                "special_terms": "ruble_payments",
                "verification_sources": ["CBR_Russia", "OFAC", "EU_Sanctions", "Rusal_reports"],
                "risk_score": 5,
                "risk_factors": ["russia_sanctions", "geopolitics", "payment_restrictions"],
                "documents_verified": ["registration", "financials", "ownership", "sanctions_disclosure"],
                "last_check_date": "2025-01-10",
                "compliance_officer": "Head of International Compliance",
                "compliance_framework": "Russia_FATF_ISO_37001",
                "source": "sanctioned_entities_db"
            }),
        ),
    ]
}

/// Deals that exist only in production.
pub fn production_deals() -> Vec<NewDocument> {
    vec![
        NewDocument::new(
            "deal_OMH-PROD-001",
            "Production deal OMH-PROD-001: sale of 1,000 tons of copper to a large industrial consumer. \
             Price: $9,800/ton. Value: $9,800,000 USD. Date: 2025-01-20. Status: executed.",
            json!({
                "deal_id": "OMH-PROD-001",
                "type": "industrial_sale",
                "commodity": "copper",
                "quantity_tons": 1000,
                "price_usd_per_ton": 9800,
                "total_amount_usd": 9800000,
                "date": "2025-01-20",
                "status": "executed",
                "risk_level": "low",
                "counterparty": "Industrial Consumer Inc.",
                "region": "Europe",
                "source": "production_data"
            }),
        ),
        NewDocument::new(
            "deal_OMH-PROD-002",
            "Production deal OMH-PROD-002: purchase of 500 tons of lithium for battery manufacturing. \
             Price: $16,500/ton. Value: $8,250,000 USD. Date: 2025-02-10. Status: confirmed.",
            json!({
                "deal_id": "OMH-PROD-002",
                "type": "battery_purchase",
                "commodity": "lithium",
                "quantity_tons": 500,
                "price_usd_per_ton": 16500,
                "total_amount_usd": 8250000,
                "date": "2025-02-10",
                "status": "confirmed",
                "risk_level": "medium",
                "counterparty": "Battery Manufacturer Ltd.",
                "region": "Asia",
                "source": "production_data"
            }),
        ),
    ]
}

/// Counterparty profiles that exist only in production.
pub fn production_kyc() -> Vec<NewDocument> {
    vec![
        NewDocument::new(
            "kyc_prod_001_trafigura",
            "KYC profile of Trafigura Group, a global commodity trader. Headquarters: Singapore. Main offices: \
             Geneva, Houston, Beijing. Business: trading oil, metals and minerals. Annual revenue: $244 billion \
             (2023). AML status: clean. LEI: 549300C5H3Q7J8ZJ7W48.",
            json!({
                "document_type": "kyc_profile",
                "company_name": "Trafigura Group Pte Ltd",
                "lei": "549300C5H3Q7J8ZJ7W48",
                "jurisdiction": "Singapore",
                "industry": "commodity_trading",
                "annual_revenue_billion_usd": 244,
                "aml_status": "clean",
                "risk_score": 2,
                "verification_sources": ["Singapore_ACRA", "OFAC", "EU_Sanctions"],
                "source": "production_kyc"
            }),
        ),
        NewDocument::new(
            "kyc_prod_002_vitol",
            "KYC profile of Vitol Group, one of the largest independent energy traders. Headquarters: \
             Rotterdam, Netherlands. Main markets: oil, gas, power. Annual revenue: $505 billion (2023). AML \
             status: clean. LEI: 549300X4ZJ8K9L5M6N59.",
            json!({
                "document_type": "kyc_profile",
                "company_name": "Vitol Group",
                "lei": "549300X4ZJ8K9L5M6N59",
                "jurisdiction": "Netherlands",
                "industry": "energy_trading",
                "annual_revenue_billion_usd": 505,
                "aml_status": "clean",
                "risk_score": 1,
                "verification_sources": ["Netherlands_Chamber", "OFAC", "Bloomberg"],
                "source": "production_kyc"
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fixture_sizes() {
        assert_eq!(minerals().len(), 5);
        assert_eq!(deals().len(), 5);
        assert_eq!(kyc().len(), 4);
        assert_eq!(production_deals().len(), 2);
        assert_eq!(production_kyc().len(), 2);
    }

    #[test]
    fn test_fixture_ids_are_unique_per_domain() {
        for docs in [
            minerals(),
            [deals(), production_deals()].concat(),
            [kyc(), production_kyc()].concat(),
        ] {
            let ids: HashSet<_> = docs.iter().filter_map(|d| d.id.clone()).collect();
            assert_eq!(ids.len(), docs.len());
        }
    }

    #[test]
    fn test_kyc_fixture_has_one_monitored_entity() {
        let monitored: Vec<_> = kyc()
            .into_iter()
            .filter(|d| d.attributes.get("aml_status") == Some(&json!("enhanced_monitoring")))
            .collect();
        assert_eq!(monitored.len(), 1);
        assert_eq!(monitored[0].id.as_deref(), Some("kyc_norilsk_nickel"));
    }
}
